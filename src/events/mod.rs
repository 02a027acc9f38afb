pub mod binner;
