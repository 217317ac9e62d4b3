pub mod coup;
