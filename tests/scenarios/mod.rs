mod bandwidth;
mod connection_states;
mod event_loop;
