mod helpers;
mod recovery_tests;
