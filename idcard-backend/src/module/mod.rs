pub mod member;
pub mod selection;
pub mod card;
pub mod export;
pub mod controller;
