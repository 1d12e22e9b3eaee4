mod back_tests;
mod consumption_tests;
mod delay_tests;
mod headers_tests;
mod net_connect_tests;
mod query_param_tests;
mod record_and_playback_tests;
