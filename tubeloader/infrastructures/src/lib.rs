pub mod boundaries;
pub mod gateways {
    pub mod downloaders;
    pub mod parsers;
    pub mod releases;
    pub mod repositories;
}
pub(crate) mod utils;
