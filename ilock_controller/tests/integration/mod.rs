mod closed_loop;
mod config_start;
