mod correlation;
mod heartbeat;
mod queue;
mod reconnect;
mod timer;
