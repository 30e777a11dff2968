mod common;
mod update;
