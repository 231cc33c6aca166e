// Interface adapters: the check-in HTTP client, capture devices and terminal output.

pub mod capture;
pub mod clients;
pub mod protocol;
pub mod render;
