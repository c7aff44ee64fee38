pub mod associations;
pub mod provider;
pub mod snapshot;

pub use associations::{FileAssociation, FileAssociations, HTML, PLAIN_TEXT};
pub use provider::{SettingsChanged, SettingsProvider};
pub use snapshot::{FontSpec, Margins, SettingsError, SettingsSnapshot};
