use std::sync::Arc;

use anyhow::{ensure, Result};
use itertools::Itertools as _;
use types::{
    nonstandard::{Fork, ForkActivation},
    primitives::BlockNumber,
};

use crate::{
    byzantium::ByzantiumVm, frontier::FrontierVm, homestead::HomesteadVm, seal::SealEngine,
    vm::VirtualMachine, Error,
};

/// Fork schedule resolved to virtual machines.
///
/// The VM for a block is the one with the greatest activation number not exceeding the block
/// number.
pub struct VmRegistry {
    activations: Vec<(BlockNumber, Arc<dyn VirtualMachine>)>,
}

impl VmRegistry {
    pub fn new(
        vm_configuration: &[ForkActivation],
        seal_engine: Arc<dyn SealEngine>,
    ) -> Result<Self> {
        ensure!(!vm_configuration.is_empty(), Error::VmConfigurationEmpty);

        for (previous, next) in vm_configuration.iter().tuple_windows() {
            ensure!(
                previous.block_number < next.block_number,
                Error::ForkActivationsNotIncreasing {
                    previous: previous.block_number,
                    next: next.block_number,
                },
            );
        }

        let activations = vm_configuration
            .iter()
            .map(|activation| {
                let vm = build_vm(activation.fork, Arc::clone(&seal_engine));
                (activation.block_number, vm)
            })
            .collect();

        Ok(Self { activations })
    }

    pub fn resolve(&self, block_number: BlockNumber) -> Result<&dyn VirtualMachine> {
        let active = self
            .activations
            .partition_point(|(activation, _)| *activation <= block_number);

        let (_, vm) = active
            .checked_sub(1)
            .and_then(|index| self.activations.get(index))
            .ok_or(Error::NoForkActive { block_number })?;

        Ok(vm.as_ref())
    }
}

pub(crate) fn build_vm(
    fork: Fork,
    seal_engine: Arc<dyn SealEngine>,
) -> Arc<dyn VirtualMachine> {
    match fork {
        Fork::Frontier => Arc::new(FrontierVm::new(seal_engine)),
        Fork::Homestead | Fork::TangerineWhistle | Fork::SpuriousDragon => {
            Arc::new(HomesteadVm::new(fork, seal_engine))
        }
        Fork::Byzantium
        | Fork::Constantinople
        | Fork::Petersburg
        | Fork::Istanbul
        | Fork::MuirGlacier => Arc::new(ByzantiumVm::new(fork, seal_engine)),
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;
    use types::config::Config;

    use crate::seal::NoProof;

    use super::*;

    fn registry(vm_configuration: &[ForkActivation]) -> Result<VmRegistry> {
        VmRegistry::new(vm_configuration, Arc::new(NoProof))
    }

    #[test_case(0 => Fork::Frontier)]
    #[test_case(1_149_999 => Fork::Frontier)]
    #[test_case(1_150_000 => Fork::Homestead)]
    #[test_case(2_463_000 => Fork::TangerineWhistle)]
    #[test_case(2_675_000 => Fork::SpuriousDragon)]
    #[test_case(4_369_999 => Fork::SpuriousDragon)]
    #[test_case(4_370_000 => Fork::Byzantium)]
    #[test_case(7_280_000 => Fork::Petersburg)]
    #[test_case(9_069_000 => Fork::Istanbul)]
    #[test_case(9_200_000 => Fork::MuirGlacier)]
    #[test_case(u64::MAX => Fork::MuirGlacier)]
    fn mainnet_resolution(block_number: BlockNumber) -> Fork {
        registry(&Config::mainnet().vm_configuration)
            .and_then(|registry| Ok(registry.resolve(block_number)?.fork()))
            .expect("mainnet configuration should cover every block")
    }

    #[test]
    fn resolution_fails_before_first_activation() -> Result<()> {
        let registry = registry(&[ForkActivation::new(5, Fork::Byzantium)])?;

        let error = registry
            .resolve(4)
            .err()
            .expect("no fork should be active before block 5");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::NoForkActive { block_number: 4 }),
        ));

        assert_eq!(registry.resolve(5)?.fork(), Fork::Byzantium);

        Ok(())
    }

    #[test]
    fn empty_configuration_is_rejected() {
        let error = registry(&[])
            .err()
            .expect("empty configuration should be rejected");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::VmConfigurationEmpty),
        ));
    }

    #[test_case(&[(0, Fork::Frontier), (0, Fork::Homestead)])]
    #[test_case(&[(0, Fork::Frontier), (10, Fork::Homestead), (5, Fork::Byzantium)])]
    fn unordered_configuration_is_rejected(activations: &[(BlockNumber, Fork)]) {
        let vm_configuration = activations
            .iter()
            .map(|(block_number, fork)| ForkActivation::new(*block_number, *fork))
            .collect_vec();

        let error = registry(&vm_configuration)
            .err()
            .expect("configuration with non-increasing activations should be rejected");

        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::ForkActivationsNotIncreasing { .. }),
        ));
    }

    #[test]
    fn every_fork_can_be_resolved() -> Result<()> {
        for fork in enum_iterator::all::<Fork>() {
            let registry = registry(&Config::tester(fork).vm_configuration)?;
            assert_eq!(registry.resolve(0)?.fork(), fork);
        }

        Ok(())
    }
}
