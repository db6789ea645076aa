mod failure_modes;
mod test_conditions;
