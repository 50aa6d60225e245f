pub mod event;
pub mod host;
pub mod openproject;
pub mod session;

pub use event::{AccessEvent, AuthEvent, AuthKind, AuthMethod, ANONYMOUS, UNKNOWN};
pub use host::HostStatus;
pub use openproject::{ActiveAppUser, AppLogin, AppLoginFailure, AppUser, AppUserActivity};
pub use session::{
    BannedIp, ConnectionRecord, Fail2banStats, Fail2banStatus, SshSessions, UserSession,
};
