mod prefab;

pub use self::prefab::*;
