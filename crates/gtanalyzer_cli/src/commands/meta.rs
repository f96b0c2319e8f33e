//! Shell completions and man pages, generated from the clap definition.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;

use crate::Cli;

const BIN: &str = "gtanalyzer";

/// One man page: file stem (`gtanalyzer-taiga-milestones`) and its command.
struct ManPage {
    name: String,
    command: clap::Command,
}

impl ManPage {
    fn render(&self) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::new();
        clap_mangen::Man::new(self.command.clone())
            .title(self.name.clone())
            .render(&mut out)?;
        Ok(out)
    }
}

fn render_completions(shell: clap_complete::Shell, out: &mut impl Write) {
    clap_complete::generate(shell, &mut Cli::command(), BIN, out);
}

/// The root page followed by one page per visible subcommand, depth first.
fn man_pages() -> Vec<ManPage> {
    let mut root = Cli::command();
    root.build();

    let mut pages = Vec::new();
    collect_pages(&root, BIN.to_string(), &mut pages);
    pages
}

fn collect_pages(command: &clap::Command, name: String, pages: &mut Vec<ManPage>) {
    pages.push(ManPage {
        name: name.clone(),
        command: command.clone(),
    });
    for sub in command
        .get_subcommands()
        .filter(|sub| !sub.is_hide_set() && sub.get_name() != "help")
    {
        collect_pages(sub, format!("{name}-{}", sub.get_name()), pages);
    }
}

fn write_pages(pages: &[ManPage], dir: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(dir)?;
    for page in pages {
        std::fs::write(dir.join(format!("{}.1", page.name)), page.render()?)?;
    }
    Ok(pages.len())
}

pub(crate) fn handle_completions(
    shell: clap_complete::Shell,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    render_completions(shell, &mut stdout);
    stdout.flush()?;
    Ok(())
}

/// Print the root page, or write every page into `output`.
pub(crate) fn handle_man(output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let pages = man_pages();
    match output {
        Some(dir) => {
            let written = write_pages(&pages, &dir)?;
            println!("Wrote {written} man pages to {}", dir.display());
        }
        None => {
            let root = pages.first().ok_or("no man page to render")?;
            std::io::stdout().write_all(&root.render()?)?;
        }
    }
    Ok(())
}
