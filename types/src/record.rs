use serde::{Deserialize, Serialize};

/// A user's favorites, the structured record exchanged across the boundary.
///
/// The native form is this struct. The foreign form is an object with the same
/// field names (see `isthmus_core::marshal`), and the serialized form is the
/// tagged binary layout in `isthmus_core::codec`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub favorite_numbers: Vec<u64>,
    pub favorite_colors: Vec<String>,
}

impl UserRecord {
    #[must_use]
    pub fn new(id: u64, favorite_numbers: Vec<u64>, favorite_colors: Vec<String>) -> Self {
        Self {
            id,
            favorite_numbers,
            favorite_colors,
        }
    }
}
