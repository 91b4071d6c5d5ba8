pub mod approval_mapper;
pub mod child_mapper;
pub mod household_mapper;
