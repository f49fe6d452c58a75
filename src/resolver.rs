//! Maps a completed job's source document to its output locators.

use crate::config::ApiRoutes;
use crate::job::{ConversionResult, SourceRef};

/// Pure, total construction of [`ConversionResult`] locators.
///
/// Nothing is queried: the service stores the audio under the id of the
/// uploaded document, so every locator is derivable from the
/// [`SourceRef`] alone.
#[derive(Debug, Clone)]
pub struct ResultResolver {
    routes: ApiRoutes,
}

impl ResultResolver {
    pub fn new(routes: ApiRoutes) -> Self {
        Self { routes }
    }

    pub fn resolve(&self, source: &SourceRef) -> ConversionResult {
        let audio_ref = self.routes.audio(source);
        ConversionResult {
            download_ref: format!("{audio_ref}?download=1"),
            audio_ref,
            segments_ref: self.routes.segments(source),
            document_ref: self.routes.document(source),
        }
    }
}
