mod helpers;
mod model_tests;
mod recovery_tests;
