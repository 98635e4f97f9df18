//! CourseHub - course management backend
//!
//! This library provides programs, courses, course materials, lecturer
//! allocation, student enrollment and progress tracking behind a JSON API.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod events;
pub mod models;
pub mod services;
pub mod storage;
