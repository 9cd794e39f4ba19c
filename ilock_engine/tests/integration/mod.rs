mod fault_lockout;
mod propagation;
