use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::kafka::{Event, EventType, KafkaProducer};
use crate::models::{DeploymentStatus, ProfileDeployment};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailNotification {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
    pub link: String,
}

/// Renders notification mails and enqueues them on the message bus.
///
/// Delivery is fire-and-forget: failures are logged and never reach the
/// request that triggered them.
#[derive(Clone)]
pub struct Notifier {
    producer: Arc<KafkaProducer>,
    from: String,
    web_app_url: String,
}

impl Notifier {
    pub fn new(producer: Arc<KafkaProducer>, config: &AppConfig) -> Self {
        Self {
            producer,
            from: config.email_from.clone(),
            web_app_url: config.web_app_url.clone(),
        }
    }

    fn compose(&self, to: &str, subject: String, body: String) -> EmailNotification {
        EmailNotification {
            to: to.to_string(),
            from: self.from.clone(),
            subject,
            body,
            link: self.web_app_url.clone(),
        }
    }

    async fn dispatch(&self, event_type: EventType, mail: EmailNotification) {
        if mail.to.trim().is_empty() {
            debug!("Skipping {:?} notification without recipient", event_type);
            return;
        }
        let key = mail.to.clone();
        let event = Event::new(event_type, mail);
        if let Err(e) = self.producer.publish(&key, &event).await {
            warn!("Failed to enqueue {:?} notification: {}", event_type, e);
        }
    }

    pub async fn email_verification(&self, to: &str, username: &str, code: &str) {
        let body = format!(
            "Hello {},\n\nYour email verification code is {}.\nConfirm it at {}/confirm-email/{}/{}",
            username, code, self.web_app_url, username, code
        );
        let mail = self.compose(to, "Verify your email address".to_string(), body);
        self.dispatch(EventType::EmailVerificationRequested, mail).await;
    }

    pub async fn password_reset(&self, to: &str, username: &str, code: &str) {
        let body = format!(
            "Hello {},\n\nUse the code {} to set a new password. If you did not request a password change you can ignore this message.",
            username, code
        );
        let mail = self.compose(to, "Password change request".to_string(), body);
        self.dispatch(EventType::PasswordResetRequested, mail).await;
    }

    pub async fn profile_recommended(&self, to: &str) {
        let body = "A new recommendation has been added to your profile. Please login to view it.".to_string();
        let mail = self.compose(to, "A new recommendation on your profile".to_string(), body);
        self.dispatch(EventType::ProfileRecommended, mail).await;
    }

    pub async fn deployment_saved(&self, to: &str, deployment: &ProfileDeployment, outbreak_name: &str) {
        let (subject, body) = deployment_message(deployment, outbreak_name);
        let mail = self.compose(to, subject, body);
        self.dispatch(EventType::DeploymentUpdated, mail).await;
    }
}

/// Subject and body describing a deployment's current state to its RDE.
pub fn deployment_message(deployment: &ProfileDeployment, outbreak_name: &str) -> (String, String) {
    if deployment.rejected_by_user {
        return (
            "Deployment Rejected".to_string(),
            format!("You have declined the deployment for {}.", outbreak_name),
        );
    }

    match deployment.status {
        DeploymentStatus::Ended => (
            "Deployment ended".to_string(),
            format!(
                "Your deployment for {} has been ended.\nPlease upload a deployment report against your outbreak.\nThank you for your service.",
                outbreak_name
            ),
        ),
        DeploymentStatus::Deployed => (
            "Deployment started".to_string(),
            format!("You are now deployed for {}.", outbreak_name),
        ),
        DeploymentStatus::PreDeployment => (
            "Deployment preparation".to_string(),
            format!("Your deployment for {} has moved to pre-deployment.", outbreak_name),
        ),
        DeploymentStatus::Initiated if deployment.accepted_by_user => (
            "Deployment Accepted".to_string(),
            format!("Your deployment for {} has been confirmed.", outbreak_name),
        ),
        DeploymentStatus::Initiated => (
            "New deployment requests on your profile".to_string(),
            "There are new deployment requests on your profile. Please login to accept or reject".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::DummyKafkaProducer;
    use chrono::NaiveDate;

    fn deployment(status: DeploymentStatus, accepted: bool, rejected: bool) -> ProfileDeployment {
        let day = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        ProfileDeployment {
            id: 1,
            profile_id: 2,
            outbreak_id: 3,
            region_id: 4,
            start_date: day,
            end_date: None,
            status,
            accepted_by_user: accepted,
            rejected_by_user: rejected,
            report_path: None,
            created_at: day.and_hms_opt(0, 0, 0).unwrap(),
            updated_at: day.and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn new_deployment_asks_for_a_response() {
        let (subject, body) = deployment_message(&deployment(DeploymentStatus::Initiated, false, false), "Ebola");
        assert_eq!(subject, "New deployment requests on your profile");
        assert!(body.contains("accept or reject"));
    }

    #[test]
    fn accepted_deployment_is_confirmed() {
        let (subject, body) = deployment_message(&deployment(DeploymentStatus::Initiated, true, false), "Ebola");
        assert_eq!(subject, "Deployment Accepted");
        assert!(body.contains("Ebola"));
    }

    #[test]
    fn ended_deployment_requests_a_report() {
        let (subject, body) = deployment_message(&deployment(DeploymentStatus::Ended, true, false), "Cholera");
        assert_eq!(subject, "Deployment ended");
        assert!(body.contains("deployment report"));
    }

    #[test]
    fn rejection_takes_precedence() {
        let (subject, _) = deployment_message(&deployment(DeploymentStatus::Initiated, false, true), "Cholera");
        assert_eq!(subject, "Deployment Rejected");
    }

    #[actix_web::test]
    async fn mail_without_recipient_is_dropped() {
        let dummy = DummyKafkaProducer::new();
        let notifier = Notifier::new(Arc::new(KafkaProducer::Dummy(dummy.clone())), &AppConfig::for_tests());
        notifier.profile_recommended("").await;
        notifier.password_reset("rde@example.org", "rde", "123456").await;

        let sent = dummy.swallowed();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].key, "rde@example.org");
        assert_eq!(sent[0].event_type, EventType::PasswordResetRequested);
        assert!(sent[0].body.contains("123456"));
    }
}
