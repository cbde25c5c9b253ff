fn main() {
    vanilla_options::contract::print_from_args();
    vanilla_options::print_abi();
}
