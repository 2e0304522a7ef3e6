use crate::error::{ModelError, Result};
use crate::terminals::InjectionData;
use sparsetools::coo::Coo;
use sparsetools::csr::CSR;

/// Sparse 0/1 matrix summing injection values into node values,
/// `M * x` with `x` indexed by injection gives a vector indexed by node.
pub struct NodeInjectionMatrix {
    pub shape: (usize, usize),
    pub matrix: CSR<usize, f64>,
}

impl NodeInjectionMatrix {
    /// Sums injection values per calculation node, one value per injection.
    pub fn sum_to_nodes(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.shape.1 {
            return Err(ModelError::ResultLength {
                expected: self.shape.1,
                actual: values.len(),
            });
        }
        if self.shape.1 == 0 {
            return Ok(vec![0.0; self.shape.0]);
        }
        Ok(&self.matrix * &values.to_vec())
    }

    /// Number of injections connected to each node.
    pub fn injection_count(&self) -> Result<Vec<f64>> {
        self.sum_to_nodes(&vec![1.0; self.shape.1])
    }
}

impl std::fmt::Debug for NodeInjectionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInjectionMatrix")
            .field("shape", &self.shape)
            .finish()
    }
}

/// Builds the node-injection incidence matrix of shape
/// `(count_of_nodes, count_of_injections)`, `(0, 0)` without injections.
pub fn make_node_injection_matrix(
    count_of_nodes: usize,
    injections: &[InjectionData],
) -> NodeInjectionMatrix {
    let ni = injections.len();
    let (rows, cols) = if ni == 0 {
        (0, 0)
    } else {
        (count_of_nodes, ni)
    };
    let mut m = Coo::with_capacity(rows, cols, ni);
    for inj in injections {
        m.push(inj.index_of_node, inj.index_of_injection, 1.0);
    }
    NodeInjectionMatrix {
        shape: (rows, cols),
        matrix: m.to_csr(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::NodeOrder;
    use crate::records::Injection;
    use crate::terminals::make_injections;
    use anyhow::Result;

    fn order(n: usize) -> NodeOrder {
        let mut order = NodeOrder::default();
        for i in 0..n {
            order.push(vec![format!("n{}", i)]);
        }
        order
    }

    #[test]
    fn test_injection_count_per_node() -> Result<()> {
        let order = order(3);
        let injections = make_injections(
            &[
                Injection::new("i0", "n2"),
                Injection::new("i1", "n0"),
                Injection::new("i2", "n2"),
            ],
            &order,
        )?;
        let m = make_node_injection_matrix(order.len(), &injections);

        assert_eq!(m.shape, (3, 3));
        assert_eq!(m.injection_count()?, vec![1.0, 0.0, 2.0]);
        assert_eq!(m.sum_to_nodes(&[1.5, 2.0, 0.5])?, vec![2.0, 0.0, 2.0]);
        Ok(())
    }

    #[test]
    fn test_sum_to_nodes_length_mismatch() -> Result<()> {
        let order = order(2);
        let injections = make_injections(
            &[Injection::new("i0", "n0"), Injection::new("i1", "n1")],
            &order,
        )?;
        let m = make_node_injection_matrix(order.len(), &injections);

        assert_eq!(
            m.sum_to_nodes(&[1.0]),
            Err(ModelError::ResultLength {
                expected: 2,
                actual: 1
            })
        );
        assert!(m.sum_to_nodes(&[1.0, 2.0, 3.0]).is_err());
        Ok(())
    }

    #[test]
    fn test_empty_injections() -> Result<()> {
        let m = make_node_injection_matrix(4, &[]);
        assert_eq!(m.shape, (0, 0));
        assert!(m.injection_count()?.is_empty());
        assert!(m.sum_to_nodes(&[1.0]).is_err());
        Ok(())
    }
}
