//! Lock wrappers - uses parking_lot if available, std otherwise.
//!
//! Both backends expose the parking_lot calling convention: `lock()`,
//! `read()` and `write()` return guards directly, and `Condvar` waits on a
//! `&mut MutexGuard`.

#[cfg(feature = "parking_lot")]
pub use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};

#[cfg(not(feature = "parking_lot"))]
mod std_sync {
    use std::sync::{
        Condvar as StdCondvar, Mutex as StdMutex, MutexGuard as StdMutexGuard,
        RwLock as StdRwLock, RwLockReadGuard, RwLockWriteGuard, WaitTimeoutResult,
    };
    use std::time::Duration;

    /// Thin wrapper around std::sync::Mutex.
    #[derive(Default)]
    pub struct Mutex<T>(StdMutex<T>);

    impl<T> Mutex<T> {
        /// Create a new mutex.
        pub const fn new(value: T) -> Self {
            Self(StdMutex::new(value))
        }

        /// Lock the mutex.
        ///
        /// Poisoning is ignored: a panicking task body must not wedge the
        /// loader for every other thread.
        pub fn lock(&self) -> MutexGuard<'_, T> {
            let guard = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            MutexGuard(Some(guard))
        }
    }

    /// Guard for std mutex.
    ///
    /// The inner guard is only `None` while a `Condvar` wait has it.
    pub struct MutexGuard<'a, T>(Option<StdMutexGuard<'a, T>>);

    impl<'a, T> std::ops::Deref for MutexGuard<'a, T> {
        type Target = T;

        fn deref(&self) -> &Self::Target {
            self.0.as_ref().expect("guard taken by condvar wait")
        }
    }

    impl<'a, T> std::ops::DerefMut for MutexGuard<'a, T> {
        fn deref_mut(&mut self) -> &mut Self::Target {
            self.0.as_mut().expect("guard taken by condvar wait")
        }
    }

    /// Thin wrapper around std::sync::RwLock.
    #[derive(Default)]
    pub struct RwLock<T>(StdRwLock<T>);

    impl<T> RwLock<T> {
        /// Create a new rwlock.
        pub const fn new(value: T) -> Self {
            Self(StdRwLock::new(value))
        }

        /// Acquire shared access.
        pub fn read(&self) -> RwLockReadGuard<'_, T> {
            self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        /// Acquire exclusive access.
        pub fn write(&self) -> RwLockWriteGuard<'_, T> {
            self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner())
        }
    }

    /// Condition variable paired with [`Mutex`].
    #[derive(Default)]
    pub struct Condvar(StdCondvar);

    impl Condvar {
        /// Create a new condition variable.
        pub const fn new() -> Self {
            Self(StdCondvar::new())
        }

        /// Block until notified.
        pub fn wait<T>(&self, guard: &mut MutexGuard<'_, T>) {
            let inner = guard.0.take().expect("guard taken by condvar wait");
            let inner = self.0.wait(inner).unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.0 = Some(inner);
        }

        /// Block until notified or until `timeout` elapses.
        pub fn wait_for<T>(&self, guard: &mut MutexGuard<'_, T>, timeout: Duration) -> WaitTimeoutResult {
            let inner = guard.0.take().expect("guard taken by condvar wait");
            let (inner, result) = self
                .0
                .wait_timeout(inner, timeout)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.0 = Some(inner);
            result
        }

        /// Wake one waiter.
        pub fn notify_one(&self) -> bool {
            self.0.notify_one();
            true
        }

        /// Wake every waiter.
        pub fn notify_all(&self) -> usize {
            self.0.notify_all();
            0
        }
    }
}

#[cfg(not(feature = "parking_lot"))]
pub use std_sync::{Condvar, Mutex, MutexGuard, RwLock};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_condvar_timeout() {
        let lock = Mutex::new(false);
        let cvar = Condvar::new();

        let mut guard = lock.lock();
        let result = cvar.wait_for(&mut guard, Duration::from_millis(10));
        assert!(result.timed_out());
        assert!(!*guard);
    }

    #[test]
    fn test_condvar_notify() {
        let pair = Arc::new((Mutex::new(false), Condvar::new()));
        let other = pair.clone();

        let handle = std::thread::spawn(move || {
            let (lock, cvar) = &*other;
            *lock.lock() = true;
            cvar.notify_all();
        });

        let (lock, cvar) = &*pair;
        let mut ready = lock.lock();
        while !*ready {
            cvar.wait(&mut ready);
        }
        drop(ready);
        handle.join().unwrap();
    }

    #[test]
    fn test_rwlock_readers() {
        let lock = RwLock::new(5u32);
        {
            let a = lock.read();
            let b = lock.read();
            assert_eq!(*a + *b, 10);
        }
        *lock.write() += 1;
        assert_eq!(*lock.read(), 6);
    }
}
