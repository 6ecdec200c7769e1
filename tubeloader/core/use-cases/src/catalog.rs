use ::domain::FormatEntry;

/// The formats advertised by the most recent listing. Every listing replaces
/// the previous one wholesale.
#[derive(Default)]
pub struct FormatCatalog {
    formats: ::std::sync::RwLock<Vec<FormatEntry>>,
}

impl FormatCatalog {
    pub fn replace(&self, formats: Vec<FormatEntry>) {
        *self.formats.write().unwrap_or_else(::std::sync::PoisonError::into_inner) = formats;
    }

    pub fn snapshot(&self) -> Vec<FormatEntry> {
        self.formats.read().unwrap_or_else(::std::sync::PoisonError::into_inner).clone()
    }

    pub fn find(&self, id: &str) -> Option<FormatEntry> {
        self.formats
            .read()
            .unwrap_or_else(::std::sync::PoisonError::into_inner)
            .iter()
            .find(|format| format.id == id)
            .cloned()
    }
}
