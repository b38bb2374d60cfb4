pub mod account;
pub mod activity;
pub mod digest;

pub use account::{Account, AccountSummary, AccountTable};
pub use activity::ViewEntry;
pub use digest::{Digest, DigestNaming};
