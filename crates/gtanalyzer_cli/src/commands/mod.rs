pub(crate) mod meta;
pub(crate) mod serve;

#[cfg(any(feature = "github", feature = "taiga"))]
pub(crate) mod shared;

#[cfg(feature = "github")]
pub(crate) mod github;

#[cfg(feature = "taiga")]
pub(crate) mod taiga;
