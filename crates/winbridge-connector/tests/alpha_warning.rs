//! Runs alone in its own binary so the process-wide notice is still unsent.

mod common;

use common::LogCapture;
use winbridge_connector::{make_names_data, show_alpha_warning};

#[test]
fn test_alpha_warning_fires_once_per_process() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let (name, _) = make_names_data("win01.example.com");
    assert_eq!(make_names_data("win01.example.com").0, name);
    let _ = make_names_data("win02.example.com");
    show_alpha_warning();

    let logs = logs.contents();
    assert_eq!(logs.matches("The @winrm connector is alpha!").count(), 1);
    assert!(logs.contains("WARN"));
}
