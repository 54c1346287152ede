use crate::Parallelism;

/// Executes the tasks by passing the values in `0..n_tasks` to `op`, possibly in parallel, while
/// splitting the amount of parallelism between the tasks.
///
/// Each task index is passed to `op` exactly once, so a task that writes only to memory owned by
/// its index produces the same result regardless of `parallelism`.
#[inline]
pub fn for_each_raw(n_tasks: usize, op: impl Send + Sync + Fn(usize), parallelism: Parallelism) {
    fn implementation(
        n_tasks: usize,
        op: &(dyn Send + Sync + Fn(usize)),
        parallelism: Parallelism,
    ) {
        if n_tasks == 1 {
            op(0);
            return;
        }

        match parallelism {
            Parallelism::None => (0..n_tasks).for_each(op),
            #[cfg(feature = "rayon")]
            Parallelism::Rayon(_) => {
                let n_threads = parallelism_degree(parallelism);

                use rayon::prelude::*;
                let min_len = Ord::max(1, n_tasks / n_threads);
                (0..n_tasks)
                    .into_par_iter()
                    .with_min_len(min_len)
                    .for_each(op);
            }
        }
    }
    implementation(n_tasks, &op, parallelism);
}

/// Unsafe [`Send`] and [`Sync`] pointer type.
pub struct Ptr<T>(pub *mut T);
unsafe impl<T> Send for Ptr<T> {}
unsafe impl<T> Sync for Ptr<T> {}
impl<T> Copy for Ptr<T> {}
impl<T> Clone for Ptr<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

/// The amount of threads that should ideally execute an operation with the given parallelism.
#[inline]
pub fn parallelism_degree(parallelism: Parallelism) -> usize {
    match parallelism {
        Parallelism::None => 1,
        #[cfg(feature = "rayon")]
        Parallelism::Rayon(0) => rayon::current_num_threads(),
        #[cfg(feature = "rayon")]
        Parallelism::Rayon(n_threads) => n_threads,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_for_each_visits_every_task_once() {
        let parallelisms = [
            Parallelism::None,
            #[cfg(feature = "rayon")]
            Parallelism::Rayon(0),
            #[cfg(feature = "rayon")]
            Parallelism::Rayon(3),
        ];
        for parallelism in parallelisms {
            for n_tasks in [1, 2, 7, 64] {
                let counts: Vec<AtomicUsize> = (0..n_tasks).map(|_| AtomicUsize::new(0)).collect();
                for_each_raw(
                    n_tasks,
                    |idx| {
                        counts[idx].fetch_add(1, Ordering::Relaxed);
                    },
                    parallelism,
                );
                for count in &counts {
                    assert!(count.load(Ordering::Relaxed) == 1);
                }
            }
        }
    }

    #[test]
    fn test_parallelism_degree() {
        assert!(parallelism_degree(Parallelism::None) == 1);
        #[cfg(feature = "rayon")]
        {
            assert!(parallelism_degree(Parallelism::Rayon(4)) == 4);
            assert!(parallelism_degree(Parallelism::Rayon(0)) == rayon::current_num_threads());
        }
    }
}
