use nordic_aurora::contact::{ContactForm, ContactStatus, FormRelay, RelayResponse, Submission, SUBJECT};
use nordic_aurora::error::ContactError;

#[derive(Default)]
struct RecordingRelay {
    reply: Option<Result<RelayResponse, ContactError>>,
    seen: Vec<Submission>,
}

impl FormRelay for RecordingRelay {
    fn submit(&mut self, submission: &Submission) -> Result<RelayResponse, ContactError> {
        self.seen.push(submission.clone());
        self.reply.clone().unwrap_or(Ok(RelayResponse {
            success: true,
            message: None,
        }))
    }
}

fn form(name: &str, email: &str, message: &str) -> ContactForm {
    ContactForm::filled(name, email, message)
}

#[test]
fn empty_message_never_reaches_the_relay() {
    let mut relay = RecordingRelay::default();
    let mut f = form("Aino", "aino@example.fi", "");
    assert!(!f.can_submit());
    assert!(!f.submit(&mut relay, "key", "Portfolio"));
    assert!(relay.seen.is_empty());
    assert_eq!(f.status(), None);
    assert_eq!(f.missing_fields(), vec!["message"]);
}

#[test]
fn submission_carries_subject_and_honeypot() {
    let mut relay = RecordingRelay::default();
    let mut f = form("Aino", "aino@example.fi", "Hei!");
    f.botcheck = "filled-by-bot".into();
    assert!(f.submit(&mut relay, "access-123", "Nordic Aurora"));

    let sent = &relay.seen[0];
    assert_eq!(sent.subject, SUBJECT);
    assert_eq!(sent.access_key, "access-123");
    assert_eq!(sent.from_name, "Nordic Aurora");
    assert_eq!(sent.botcheck, "filled-by-bot");

    let json = serde_json::to_value(sent).expect("serialize");
    assert_eq!(json["message"], "Hei!");
    assert_eq!(json["subject"], SUBJECT);
}

#[test]
fn relay_rejection_surfaces_its_message() {
    let mut relay = RecordingRelay {
        reply: Some(RelayResponse::from_json(r#"{"success":false,"message":"Invalid access key"}"#)),
        ..RecordingRelay::default()
    };
    let mut f = form("Aino", "aino@example.fi", "Hei!");
    assert!(f.submit(&mut relay, "bad", "site"));
    assert_eq!(f.status(), Some(&ContactStatus::Error("Invalid access key".into())));
    assert_eq!(f.name, "Aino");
}

#[test]
fn network_failure_is_not_retried() {
    let mut relay = RecordingRelay {
        reply: Some(Err(ContactError::Network("connection reset".into()))),
        ..RecordingRelay::default()
    };
    let mut f = form("Aino", "aino@example.fi", "Hei!");
    f.submit(&mut relay, "key", "site");
    assert_eq!(relay.seen.len(), 1);
    assert!(matches!(f.status(), Some(ContactStatus::Error(msg)) if msg.contains("connection reset")));
}

#[test]
fn missing_access_key_sets_error_without_sending() {
    let mut relay = RecordingRelay::default();
    let mut f = form("Aino", "aino@example.fi", "Hei!");
    assert!(!f.submit(&mut relay, "  ", "site"));
    assert!(relay.seen.is_empty());
    assert!(matches!(f.status(), Some(ContactStatus::Error(_))));
}

#[test]
fn unreadable_relay_body_is_an_error() {
    assert!(RelayResponse::from_json("<html>").is_err());
    let ok = RelayResponse::from_json("{}").expect("defaults");
    assert!(!ok.success);
}
