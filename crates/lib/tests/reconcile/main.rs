mod common;

mod dependency_tests;
mod scenario_tests;
