//! Tracked Resource Set vocabulary

pub mod trs {
    pub const NS: &str = "http://open-services.net/ns/core/trs#";
    pub const CREATION: &str = "http://open-services.net/ns/core/trs#Creation";
    pub const MODIFICATION: &str = "http://open-services.net/ns/core/trs#Modification";
    pub const DELETION: &str = "http://open-services.net/ns/core/trs#Deletion";
    pub const CHANGED: &str = "http://open-services.net/ns/core/trs#changed";
    pub const ORDER: &str = "http://open-services.net/ns/core/trs#order";
}
