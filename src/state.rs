/// Value the council can agree on
pub trait Value: std::hash::Hash
    + std::fmt::Debug
    + std::fmt::Display
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Clone
    + Eq
    + Send
    + Sync
    + 'static
{
}

impl<T> Value for T where T: std::hash::Hash
    + std::fmt::Debug
    + std::fmt::Display
    + serde::Serialize
    + serde::de::DeserializeOwned
    + Clone
    + Eq
    + Send
    + Sync
    + 'static
{
}
