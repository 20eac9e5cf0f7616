//! Well-known document ids, field names, and type tags.

/// The single profile document every player device maintains.
pub const PROFILE_DOC_ID: &str = "player_data";

/// Profile field naming the ship-model document to render with.
/// Empty string means "use the default ship".
pub const FIELD_SHIP_REF: &str = "ship_ref";

/// Profile field holding the best score seen so far.
pub const FIELD_HIGH_SCORE: &str = "high_score";

/// Field carrying a record's type tag.
pub const FIELD_TYPE: &str = "type";

/// Type tag a document must carry to be eligible as a ship model.
pub const SHIP_MODEL_TYPE: &str = "ship_model";

/// Optional metadata override on a ship-model record, passed through to
/// the binding layer untouched.
pub const FIELD_RATE_OF_FIRE: &str = "rate_of_fire";
