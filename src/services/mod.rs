pub mod auth;
pub mod deployments;
pub mod export;
pub mod otp;
pub mod outbreaks;
pub mod profile_extras;
pub mod profiles;
pub mod reference;
pub mod stats;
pub mod storage;
pub mod users;

pub use auth::AuthService;
pub use deployments::{DeploymentFilter, DeploymentService, SavedDeployment};
pub use otp::OtpService;
pub use outbreaks::OutbreakService;
pub use profile_extras::{ProfileLanguageService, QualificationService, RecommendationService};
pub use profiles::ProfileService;
pub use reference::*;
pub use stats::StatsService;
pub use users::UserService;
