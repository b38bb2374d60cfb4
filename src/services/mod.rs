pub mod auth_service;
pub mod auth_service_impl;
pub use auth_service::{AuthError, AuthService, LoginOutcome, LoginWarning, Session};
pub use auth_service_impl::BlobAuthService;

pub mod account_service;
pub mod account_service_impl;
pub use account_service::{AccountError, AccountService, CreatedAccount, NewAccount};
pub use account_service_impl::BlobAccountService;

pub mod digest_service;
pub mod digest_service_impl;
pub use digest_service::{DigestError, DigestService, OpenedDigest};
pub use digest_service_impl::BlobDigestService;

pub mod stats_service;
pub use stats_service::{RecentActivity, StatsError, StatsService, StatsSummary};
