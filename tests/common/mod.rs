#![allow(dead_code)]

pub mod tasks;
