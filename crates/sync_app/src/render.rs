//! Plain-text rendering of the live dashboard.

use chrono::{DateTime, Local};
use sync_core::{JobProgressRecord, Notification, NotificationKind, MAX_PROGRESS};

const BAR_WIDTH: usize = 20;

pub fn render(
    now: DateTime<Local>,
    notifications: &[Notification],
    jobs: &[JobProgressRecord],
) -> Vec<String> {
    let mut lines = Vec::with_capacity(notifications.len() + jobs.len() + 1);
    lines.push(format!(
        "[{}] notifications: {} | running jobs: {}",
        now.format("%H:%M:%S"),
        notifications.len(),
        jobs.len()
    ));

    for notification in notifications {
        lines.push(format!(
            "  #{:<3} {:<8} {}",
            notification.id,
            kind_label(notification.kind),
            describe(notification)
        ));
    }

    for job in jobs {
        lines.push(format!(
            "  job {} [{}] {:>3}% {}",
            job.job_id,
            progress_bar(job.progress),
            job.progress,
            job.message
        ));
    }

    lines
}

fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Info => "info",
        NotificationKind::Success => "success",
        NotificationKind::Error => "error",
        NotificationKind::Progress => "progress",
    }
}

fn describe(notification: &Notification) -> String {
    let mut text = notification.title.clone();
    if let Some(progress) = notification.progress {
        text.push_str(&format!(" ({progress}%)"));
    }
    if let Some(message) = &notification.message {
        text.push_str(": ");
        text.push_str(message);
    }
    text
}

fn progress_bar(progress: u8) -> String {
    let filled = usize::from(progress.min(MAX_PROGRESS)) * BAR_WIDTH / usize::from(MAX_PROGRESS);
    format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use sync_core::{NewNotification, NotificationStore};

    use super::*;

    #[test]
    fn renders_notifications_and_jobs() {
        let mut store = NotificationStore::new();
        store.create(NewNotification::progress("Scraping Rival", 40));
        store.create(NewNotification::error("Scrape failed").with_message("timeout"));
        let jobs = vec![JobProgressRecord {
            job_id: "J1".to_string(),
            progress: 40,
            message: "page 2".to_string(),
        }];
        let now = Local
            .with_ymd_and_hms(2026, 1, 2, 9, 5, 7)
            .single()
            .unwrap_or_else(Local::now);

        let lines = render(now, store.list(), &jobs);

        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("notifications: 2 | running jobs: 1"));
        assert!(lines[1].contains("progress") && lines[1].contains("Scraping Rival (40%)"));
        assert!(lines[2].contains("Scrape failed: timeout"));
        assert!(lines[3].contains("########------------"));
    }

    #[test]
    fn bar_is_full_at_completion() {
        assert_eq!(progress_bar(100), "#".repeat(BAR_WIDTH));
        assert_eq!(progress_bar(0), "-".repeat(BAR_WIDTH));
    }
}
