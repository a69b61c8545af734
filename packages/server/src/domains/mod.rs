// Business domains
pub mod materials;
