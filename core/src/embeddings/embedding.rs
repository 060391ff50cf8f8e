use crate::document::Fragment;

#[derive(Clone, Debug, PartialEq)]
/// Embedding of a fragment
pub struct Embedding {
    /// The fragment the vector was computed from.
    pub fragment: Fragment,
    /// The numerical embedding vector of the fragment's text.
    pub embedded_data: Vec<f64>,
}
