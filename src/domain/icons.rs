//! Category icon catalog.
//!
//! The fixed set of icon names a category may reference. Lookups are
//! exact and case-sensitive; `search` is the picker's fuzzy filter.

pub const CATALOG: [&str; 48] = [
    "Folder",
    "Wallet",
    "Receipt",
    "CreditCard",
    "Home",
    "Car",
    "ShoppingCart",
    "Heart",
    "BookOpen",
    "Gamepad2",
    "Music",
    "Camera",
    "Smartphone",
    "Laptop",
    "Tv",
    "Watch",
    "Shirt",
    "Footprints",
    "Coffee",
    "Pizza",
    "Utensils",
    "Plane",
    "Train",
    "Bus",
    "Briefcase",
    "GraduationCap",
    "HeartPulse",
    "Pill",
    "Dumbbell",
    "Trophy",
    "Gift",
    "Wrench",
    "Hammer",
    "Paintbrush",
    "Scissors",
    "Zap",
    "Lightbulb",
    "Flame",
    "Droplet",
    "Leaf",
    "Globe",
    "Cloud",
    "Sun",
    "Moon",
    "Star",
    "ThumbsUp",
    "Award",
    "Target",
];

pub fn is_known(name: &str) -> bool {
    CATALOG.contains(&name)
}

/// Icons whose name contains `query`, ignoring case. A blank query
/// returns the whole catalog in catalog order.
pub fn search(query: &str) -> Vec<&'static str> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return CATALOG.to_vec();
    }
    CATALOG
        .iter()
        .copied()
        .filter(|name| name.to_lowercase().contains(&needle))
        .collect()
}
