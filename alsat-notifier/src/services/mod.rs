pub mod saved_search_service;
