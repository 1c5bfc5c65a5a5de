mod categories;
mod invalid_json;
mod notes;
