//! File-input selection state.
//!
//! Mirrors a browser `<input type="file">`: choosing the file that is already
//! selected does not fire a change, so the selection has to be cleared
//! before the picker is reopened for the same file.

use tracing::debug;

use crate::blob::ImageBlob;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Selection {
    name: String,
    digest: String,
}

#[derive(Debug, Default)]
pub struct FileInput {
    value: Option<Selection>,
    dialog_requested: bool,
}

impl FileInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a choice from the dialog. Returns whether the selection
    /// changed, i.e. whether a change notification fires.
    pub fn choose(&mut self, file: &ImageBlob) -> bool {
        self.dialog_requested = false;

        let selection = Selection {
            name: file.name().to_string(),
            digest: file.digest().to_string(),
        };
        if self.value.as_ref() == Some(&selection) {
            debug!("FileInput: '{}' already selected, no change", selection.name);
            return false;
        }

        self.value = Some(selection);
        true
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    /// Ask the front end to show the native selection dialog.
    pub fn open(&mut self) {
        self.dialog_requested = true;
    }

    /// Withdraw a pending dialog request without touching the selection.
    pub fn close(&mut self) {
        self.dialog_requested = false;
    }

    pub fn dialog_requested(&self) -> bool {
        self.dialog_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::tests::sample_png;

    fn png(name: &str) -> ImageBlob {
        ImageBlob::from_file(name, sample_png()).unwrap()
    }

    #[test]
    fn test_same_file_does_not_fire_twice() {
        let mut input = FileInput::new();
        assert!(input.choose(&png("plate.png")));
        assert!(!input.choose(&png("plate.png")));
    }

    #[test]
    fn test_clear_allows_reselecting() {
        let mut input = FileInput::new();
        input.choose(&png("plate.png"));
        input.clear();
        input.open();
        assert!(input.dialog_requested());
        assert!(input.choose(&png("plate.png")));
        assert!(!input.dialog_requested());
    }

    #[test]
    fn test_different_name_fires() {
        let mut input = FileInput::new();
        input.choose(&png("a.png"));
        assert!(input.choose(&png("b.png")));
        assert!(!input.choose(&png("b.png")));
    }

    #[test]
    fn test_close_keeps_selection() {
        let mut input = FileInput::new();
        input.choose(&png("a.png"));
        input.open();
        input.close();
        assert!(!input.dialog_requested());
        assert!(!input.choose(&png("a.png")));
    }
}
