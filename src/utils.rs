/// `workload-` followed by 8 random hex digits.
pub(crate) fn generate_workload_identity_name() -> String {
    use rand::RngCore;
    format!("workload-{:08x}", rand::rng().next_u32())
}
