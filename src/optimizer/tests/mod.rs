mod integration_tests;
mod property_tests;
