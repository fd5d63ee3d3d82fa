pub mod cascade;
pub mod phone;
pub mod provider;
pub mod whatsapp;
