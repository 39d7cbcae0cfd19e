use mockall::mock;
use cohsim_core::soc::memory::store::BackingStore;

mock! {
    pub Store {}
    impl BackingStore for Store {
        fn get(&self, address: u64) -> u64;
        fn put(&mut self, address: u64, data: u64);
    }
}
