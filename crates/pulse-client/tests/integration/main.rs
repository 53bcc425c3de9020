mod common;
mod report_tests;
