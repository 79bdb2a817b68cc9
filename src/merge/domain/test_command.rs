//! Test command auto-detection from repository marker files.

/// Marker files checked in priority order, with the command each implies.
const MARKERS: [(&str, &str); 7] = [
    ("Cargo.toml", "cargo test"),
    ("package.json", "npm test"),
    ("go.mod", "go test ./..."),
    ("pyproject.toml", "pytest"),
    ("setup.py", "pytest"),
    ("pytest.ini", "pytest"),
    ("Makefile", "make test"),
];

/// Picks a test command for a checkout.
///
/// A non-blank `configured` command wins; otherwise the first marker file
/// for which `exists` returns `true` selects the command. Returns `None`
/// when nothing applies.
///
/// # Examples
///
///     use atelier::merge::domain::detect_test_command;
///
///     let command = detect_test_command(None, |file| file == "go.mod");
///     assert_eq!(command.as_deref(), Some("go test ./..."));
///     assert_eq!(detect_test_command(Some("just test"), |_| true).as_deref(), Some("just test"));
#[must_use]
pub fn detect_test_command(
    configured: Option<&str>,
    exists: impl Fn(&str) -> bool,
) -> Option<String> {
    if let Some(command) = configured.map(str::trim).filter(|command| !command.is_empty()) {
        return Some(command.to_owned());
    }
    MARKERS
        .iter()
        .find(|(marker, _)| exists(marker))
        .map(|(_, command)| (*command).to_owned())
}
