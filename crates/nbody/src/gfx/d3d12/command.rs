#[cfg(windows)]
use windows::{
    core::{Interface, PCSTR},
    Win32::{
        Foundation::{CloseHandle, HANDLE},
        Graphics::Direct3D12::*,
        System::Threading::{CreateEventA, WaitForSingleObject, INFINITE},
    },
};

#[cfg(windows)]
use super::util::set_name;
#[cfg(windows)]
use crate::error::Result;

/// CPU-side counter of the values signalled on a fence. Values handed out are
/// strictly increasing, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceTimeline {
    next: u64,
}

impl Default for FenceTimeline {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl FenceTimeline {
    /// Returns the value to signal now and advances the counter.
    #[must_use]
    pub fn advance(&mut self) -> u64 {
        let value = self.next;
        self.next += 1;
        value
    }

    /// The most recently handed out value, or 0 before the first signal.
    pub fn last_signalled(&self) -> u64 {
        self.next - 1
    }

    /// Whether the GPU has reached `value` given the fence's completed value.
    pub fn is_reached(completed: u64, value: u64) -> bool {
        completed >= value
    }
}

/// A command queue with the single allocator and command list that record into it.
///
/// Submission is single-buffered: the list is only reset after the CPU waited for the
/// previous submission through the queue's fence.
#[cfg(windows)]
pub struct Queue {
    queue: ID3D12CommandQueue,

    // backing memory for the recorded commands
    // cannot be reset until the GPU finishes executing all of them
    allocator: ID3D12CommandAllocator,
    command_list: ID3D12GraphicsCommandList,

    fence: ID3D12Fence,
    fence_event: HANDLE,
    timeline: FenceTimeline,

    name: String,
}

#[cfg(windows)]
impl Queue {
    /// The command list is returned open so initialization commands can be recorded into it.
    pub fn build(
        device: &ID3D12Device2,
        command_list_type: D3D12_COMMAND_LIST_TYPE,
        name: &str,
    ) -> Result<Self> {
        let desc = D3D12_COMMAND_QUEUE_DESC {
            Type: command_list_type,
            Priority: D3D12_COMMAND_QUEUE_PRIORITY_NORMAL.0,
            Flags: D3D12_COMMAND_QUEUE_FLAG_NONE,
            NodeMask: 0,
        };
        let queue: ID3D12CommandQueue = unsafe { device.CreateCommandQueue(&desc) }?;
        set_name(&queue, name)?;

        let allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(command_list_type) }?;
        set_name(&allocator, &format!("{name}::allocator"))?;

        let command_list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(0, command_list_type, &allocator, None::<&ID3D12PipelineState>)
        }?;
        set_name(&command_list, &format!("{name}::command_list"))?;

        let fence: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }?;
        set_name(&fence, &format!("{name}::fence"))?;

        let fence_event = unsafe { CreateEventA(None, false, false, PCSTR::null()) }?;

        tracing::debug!(name, "Created command queue");

        Ok(Self {
            queue,
            allocator,
            command_list,
            fence,
            fence_event,
            timeline: FenceTimeline::default(),
            name: name.to_string(),
        })
    }

    #[must_use]
    pub fn get(&self) -> &ID3D12CommandQueue {
        &self.queue
    }

    pub fn command_list(&self) -> &ID3D12GraphicsCommandList {
        &self.command_list
    }

    /// Reopens the command list. Only valid once the previous submission has completed.
    pub fn reset(&self, initial_state: Option<&ID3D12PipelineState>) -> Result<()> {
        unsafe {
            self.allocator.Reset()?;
            self.command_list.Reset(&self.allocator, initial_state)?;
        }
        Ok(())
    }

    pub fn close(&self) -> Result<()> {
        unsafe { self.command_list.Close() }?;
        Ok(())
    }

    pub fn execute(&self) -> Result<()> {
        unsafe {
            self.command_list.Close()?;

            let command_lists = [Some(self.command_list.cast::<ID3D12CommandList>()?)];
            self.queue.ExecuteCommandLists(&command_lists);
        }
        Ok(())
    }

    /// Signals the next fence value and blocks until the GPU reaches it.
    pub fn wait_for_previous_frame(&mut self) -> Result<()> {
        let value = self.timeline.advance();
        unsafe { self.queue.Signal(&self.fence, value) }?;

        let completed = unsafe { self.fence.GetCompletedValue() };
        if !FenceTimeline::is_reached(completed, value) {
            unsafe {
                self.fence.SetEventOnCompletion(value, self.fence_event)?;
                WaitForSingleObject(self.fence_event, INFINITE);
            }
        }

        Ok(())
    }

    pub fn last_signalled(&self) -> u64 {
        self.timeline.last_signalled()
    }
}

#[cfg(windows)]
impl Drop for Queue {
    fn drop(&mut self) {
        if let Err(e) = self.wait_for_previous_frame() {
            tracing::warn!(queue = %self.name, "Failed to drain the queue: {e}");
        }
        if let Err(e) = unsafe { CloseHandle(self.fence_event) } {
            tracing::warn!(queue = %self.name, "Failed to close the fence event: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_start_at_one_and_increase() {
        let mut timeline = FenceTimeline::default();
        assert_eq!(timeline.last_signalled(), 0);

        let values: Vec<u64> = (0..4).map(|_| timeline.advance()).collect();
        assert_eq!(values, [1, 2, 3, 4]);
        assert_eq!(timeline.last_signalled(), 4);
    }

    #[test]
    fn reached_once_completed_catches_up() {
        assert!(!FenceTimeline::is_reached(0, 1));
        assert!(FenceTimeline::is_reached(1, 1));
        assert!(FenceTimeline::is_reached(3, 2));
    }
}
