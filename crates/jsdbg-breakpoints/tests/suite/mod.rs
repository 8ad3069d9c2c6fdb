mod binder_instrument;
mod binder_off;
mod end_to_end;
mod long_parse;
mod prediction_cache;
mod predictor;
mod registry;
mod support;
